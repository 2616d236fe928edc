//! tests/session_tests.rs
//! Ciclo de vida de sesiones, registro, single-flight, eventos y pausas.

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use actix_rt::test;

    use crate::models::event_model::CampaignEvent;
    use crate::models::session_model::{SessionEvent, SessionState};
    use crate::services::event_hub::EventHub;
    use crate::services::pacing::{JitteredPacing, PacingPolicy};
    use crate::services::progress_reporter::{CampaignChannel, ProgressReporter};
    use crate::services::run_tracker::RunTracker;
    use crate::services::session_registry::{wait_until_connected, SessionHandle, SessionLifecycle, SessionRegistry};
    use crate::tests::support::{FakeSession, RecordingSink};

    #[test]
    async fn test_lifecycle_happy_path() {
        let lifecycle = SessionLifecycle::new();
        assert_eq!(lifecycle.state(), SessionState::Initializing);

        assert_eq!(lifecycle.apply(SessionEvent::Qr).unwrap(), SessionState::AwaitingScan);
        assert_eq!(lifecycle.apply(SessionEvent::Qr).unwrap(), SessionState::AwaitingScan);
        let state = lifecycle
            .apply(SessionEvent::Ready {
                number: Some("5541999990000@c.us".to_string()),
            })
            .unwrap();
        assert_eq!(state, SessionState::Connected);
        assert_eq!(lifecycle.tenant_address(), Some("5541999990000".to_string()));

        let state = lifecycle
            .apply(SessionEvent::Disconnected {
                reason: Some("LOGOUT".to_string()),
            })
            .unwrap();
        assert_eq!(state, SessionState::Disconnected);
    }

    #[test]
    async fn test_lifecycle_rejects_invalid_transitions() {
        let lifecycle = SessionLifecycle::new();
        lifecycle.apply(SessionEvent::Disconnected { reason: None }).unwrap();

        assert!(lifecycle.apply(SessionEvent::Qr).is_err());
        assert!(lifecycle.apply(SessionEvent::Ready { number: None }).is_err());
        assert_eq!(lifecycle.state(), SessionState::Disconnected);

        assert_eq!(lifecycle.apply(SessionEvent::Restart).unwrap(), SessionState::Initializing);
        assert_eq!(lifecycle.apply(SessionEvent::Qr).unwrap(), SessionState::AwaitingScan);
    }

    #[test]
    async fn test_session_event_parses_from_webhook_json() {
        let event: SessionEvent = serde_json::from_str(r#"{"event":"ready","number":"5541999990000"}"#).unwrap();
        assert_eq!(
            event,
            SessionEvent::Ready {
                number: Some("5541999990000".to_string())
            }
        );
        let event: SessionEvent = serde_json::from_str(r#"{"event":"qr"}"#).unwrap();
        assert_eq!(event, SessionEvent::Qr);
    }

    #[test]
    async fn test_wait_until_connected() {
        let lifecycle = Arc::new(SessionLifecycle::new());

        let waiter = {
            let rx = lifecycle.subscribe();
            tokio::spawn(async move { wait_until_connected(rx, Duration::from_secs(5)).await })
        };
        lifecycle.apply(SessionEvent::Qr).unwrap();
        lifecycle.apply(SessionEvent::Ready { number: None }).unwrap();
        assert!(waiter.await.unwrap());

        let idle = SessionLifecycle::new();
        assert!(!wait_until_connected(idle.subscribe(), Duration::from_millis(20)).await);
    }

    #[test]
    async fn test_registry_keeps_first_session_and_finds_by_address() {
        let registry = SessionRegistry::new();
        let first = Arc::new(FakeSession::connected("5541999990000"));
        let second = Arc::new(FakeSession::idle());

        registry.register("Operador Uno", first.clone());
        let kept = registry.register("Operador Uno", second);
        assert_eq!(kept.lifecycle().state(), SessionState::Connected);
        assert!(registry.get("Operador-Uno").is_some());

        let (username, handle) = registry.find_by_tenant_address("5541999990000@c.us").unwrap();
        assert_eq!(username, "Operador-Uno");
        assert_eq!(handle.lifecycle().tenant_address(), Some("5541999990000".to_string()));
        assert!(registry.find_by_tenant_address("5511000000000").is_none());

        assert!(registry.remove("Operador Uno").is_some());
        assert!(registry.get("Operador Uno").is_none());
    }

    #[test]
    async fn test_run_guard_releases_on_drop() {
        let tracker = RunTracker::new();
        let guard = tracker.try_acquire("5541999990000").unwrap();
        assert_eq!(guard.tenant(), "5541999990000");
        assert!(tracker.try_acquire("5541999990000").is_none());
        assert!(tracker.try_acquire("5511000000000").is_some());
        assert!(tracker.is_active("5541999990000"));

        drop(guard);
        assert!(!tracker.is_active("5541999990000"));
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    async fn test_event_hub_delivers_per_tenant() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe("5541999990000");
        let mut other = hub.subscribe("5511000000000");

        let sink = hub.sink_for("5541999990000");
        sink.emit(CampaignEvent::Log("hola".to_string())).unwrap();
        sink.emit(CampaignEvent::CampaignFinished).unwrap();

        assert_eq!(rx.recv().await.unwrap(), CampaignEvent::Log("hola".to_string()));
        assert_eq!(rx.recv().await.unwrap(), CampaignEvent::CampaignFinished);
        assert!(other.try_recv().is_err());

        // sin suscriptores no falla
        assert_eq!(hub.publish("5599999999999", CampaignEvent::CampaignFinished), 0);
    }

    #[test]
    async fn test_sse_format() {
        assert_eq!(
            CampaignEvent::Log("▶️ ok".to_string()).to_sse(),
            "event: log\ndata: {\"message\":\"▶️ ok\"}\n\n"
        );
        assert_eq!(
            CampaignEvent::CampaignFinished.to_sse(),
            "event: campaign-finished\ndata: {}\n\n"
        );
    }

    #[test]
    async fn test_reporter_emits_log_and_finished() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::new(CampaignChannel {
            events: Some(sink.clone()),
            ..CampaignChannel::default()
        });

        reporter.report("paso 1").await;
        reporter.finish();

        assert_eq!(
            sink.events(),
            vec![
                CampaignEvent::Log("paso 1".to_string()),
                CampaignEvent::CampaignFinished
            ]
        );

        // sin canal no hace nada
        ProgressReporter::new(CampaignChannel::default()).report("nadie").await;
    }

    #[test]
    async fn test_jittered_pacing_stays_in_bounds() {
        let pacing = JitteredPacing::new(Duration::from_millis(3000), Duration::from_millis(2000));
        for i in 0..50 {
            let delay = pacing.next_delay(i);
            assert!(delay >= Duration::from_millis(3000));
            assert!(delay <= Duration::from_millis(5000));
        }

        let fixed = JitteredPacing::new(Duration::from_millis(10), Duration::ZERO);
        assert_eq!(fixed.next_delay(0), Duration::from_millis(10));
    }
}
