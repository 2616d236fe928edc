//! tests/dispatcher_tests.rs
//! Pruebas de `SendDispatcher`: orden de candidatos, fallback y recencia.

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use actix_rt::test;
    use chrono::Utc;

    use crate::models::campaign_model::{CampaignRow, CampaignStats, MediaAttachment, MediaKind, RowOutcome};
    use crate::models::session_model::MessagePayload;
    use crate::models::contact_model::{Contact, SendOutcome};
    use crate::services::contact_store::{ContactStore, SqliteContactStore};
    use crate::services::recency_guard::{RecencyGuard, RecencyPolicy};
    use crate::services::send_dispatcher::{DispatchContext, SendDispatcher};
    use crate::tests::support::{FakeSession, TENANT};

    const ADDRESS_A: &str = "554133330001";
    const ADDRESS_B: &str = "554133330002";
    const ADDRESS_C: &str = "5541999990003";

    fn dispatcher(store: &SqliteContactStore, policy: RecencyPolicy) -> SendDispatcher {
        let shared: Arc<dyn ContactStore> = Arc::new(store.clone());
        let recency = RecencyGuard::new(shared.clone(), 90);
        SendDispatcher::new(shared, recency, policy, "55", Duration::ZERO)
    }

    /// A y B estructurados, C libre
    fn three_candidate_row() -> CampaignRow {
        CampaignRow {
            name: "Bruno Lima".to_string(),
            identifier: "333".to_string(),
            area_codes: ["41".to_string(), "41".to_string(), String::new()],
            local_numbers: ["33330001".to_string(), "33330002".to_string(), String::new()],
            phones: ["41999990003".to_string(), String::new(), String::new()],
            ..CampaignRow::default()
        }
    }

    fn context<'a>(session: &'a FakeSession) -> DispatchContext<'a> {
        DispatchContext {
            tenant: TENANT,
            template: "Oi @nome",
            media: None,
            session,
        }
    }

    async fn mark_sent(store: &SqliteContactStore, identifier: &str, address: &str, days_ago: i64) {
        store
            .upsert_contact(
                TENANT,
                &Contact {
                    identifier: identifier.to_string(),
                    name: "Previo".to_string(),
                    branch: String::new(),
                    chosen_address: address.to_string(),
                    birth_date: String::new(),
                    last_sent_at: Some(Utc::now() - chrono::Duration::days(days_ago)),
                },
            )
            .await
            .unwrap();
    }

    #[test]
    async fn test_falls_back_to_next_registered_candidate() {
        let store = SqliteContactStore::in_memory();
        let session = FakeSession::connected(TENANT).with_registered(&[ADDRESS_B, ADDRESS_C]);

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .dispatch(&context(&session), &three_candidate_row())
            .await
            .unwrap();

        assert_eq!(
            result.outcome,
            RowOutcome::Sent {
                address: ADDRESS_B.to_string()
            }
        );
        assert_eq!(result.failed_attempts, 0);
        assert_eq!(session.checked(), vec![ADDRESS_A.to_string(), ADDRESS_B.to_string()]);
        assert_eq!(session.sent_addresses(), vec![ADDRESS_B.to_string()]);

        let log = store.send_log_for(TENANT, "333").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].outcome, SendOutcome::Sent);
        let contact = store.get_contact(TENANT, "333").await.unwrap().unwrap();
        assert_eq!(contact.chosen_address, ADDRESS_B);
    }

    #[test]
    async fn test_failed_send_is_logged_and_next_candidate_tried() {
        let store = SqliteContactStore::in_memory();
        let session = FakeSession::connected(TENANT)
            .with_registered(&[ADDRESS_A, ADDRESS_B])
            .with_failing(&[ADDRESS_A]);

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .dispatch(&context(&session), &three_candidate_row())
            .await
            .unwrap();

        assert_eq!(
            result.outcome,
            RowOutcome::Sent {
                address: ADDRESS_B.to_string()
            }
        );
        assert_eq!(result.failed_attempts, 1);
        let outcomes: Vec<SendOutcome> = store
            .send_log_for(TENANT, "333")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.outcome)
            .collect();
        assert_eq!(outcomes, vec![SendOutcome::Failed, SendOutcome::Sent]);
    }

    #[test]
    async fn test_no_registered_candidate_logs_no_whatsapp() {
        let store = SqliteContactStore::in_memory();
        let session = FakeSession::connected(TENANT);

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .dispatch(&context(&session), &three_candidate_row())
            .await
            .unwrap();

        assert_eq!(result.outcome, RowOutcome::NoChannelPresence);
        assert_eq!(session.checked().len(), 3);
        assert!(session.sent().is_empty());
        let log = store.send_log_for(TENANT, "333").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].outcome, SendOutcome::NoWhatsapp);
        assert!(store.get_contact(TENANT, "333").await.unwrap().is_none());
    }

    #[test]
    async fn test_row_without_phones_has_no_contact_info() {
        let store = SqliteContactStore::in_memory();
        let session = FakeSession::connected(TENANT);
        let row = CampaignRow {
            identifier: "444".to_string(),
            ..CampaignRow::default()
        };

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .dispatch(&context(&session), &row)
            .await
            .unwrap();

        assert_eq!(result.outcome, RowOutcome::NoContactInfo);
        assert!(session.checked().is_empty());
        assert!(store.send_log_for(TENANT, "444").await.unwrap().is_empty());
    }

    #[test]
    async fn test_recent_candidate_blocks_whole_row_by_default() {
        let store = SqliteContactStore::in_memory();
        mark_sent(&store, "999", ADDRESS_A, 10).await;
        let session = FakeSession::connected(TENANT).with_registered(&[ADDRESS_A, ADDRESS_B]);

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .dispatch(&context(&session), &three_candidate_row())
            .await
            .unwrap();

        assert_eq!(result.outcome, RowOutcome::IgnoredRecent);
        assert!(session.checked().is_empty());
        assert!(session.sent().is_empty());
    }

    #[test]
    async fn test_skip_recent_candidate_policy_tries_the_rest() {
        let store = SqliteContactStore::in_memory();
        mark_sent(&store, "999", ADDRESS_A, 10).await;
        let session = FakeSession::connected(TENANT).with_registered(&[ADDRESS_A, ADDRESS_B]);

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .with_policy(RecencyPolicy::SkipRecentCandidate)
            .dispatch(&context(&session), &three_candidate_row())
            .await
            .unwrap();

        assert_eq!(
            result.outcome,
            RowOutcome::Sent {
                address: ADDRESS_B.to_string()
            }
        );
        assert_eq!(session.checked(), vec![ADDRESS_B.to_string()]);
    }

    #[test]
    async fn test_contact_outside_window_is_eligible_again() {
        let store = SqliteContactStore::in_memory();
        mark_sent(&store, "333", ADDRESS_A, 120).await;
        let session = FakeSession::connected(TENANT).with_registered(&[ADDRESS_A]);

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .dispatch(&context(&session), &three_candidate_row())
            .await
            .unwrap();

        assert_eq!(
            result.outcome,
            RowOutcome::Sent {
                address: ADDRESS_A.to_string()
            }
        );
        let contact = store.get_contact(TENANT, "333").await.unwrap().unwrap();
        let last = contact.last_sent_at.unwrap();
        assert!(Utc::now() - last < chrono::Duration::minutes(1));
    }

    #[test]
    async fn test_audio_failure_after_text_does_not_resend_to_next_candidate() {
        let store = SqliteContactStore::in_memory();
        let session = FakeSession::connected(TENANT)
            .with_registered(&[ADDRESS_A, ADDRESS_B])
            .with_failing_media();
        let audio = MediaAttachment {
            kind: MediaKind::Audio,
            mimetype: "audio/ogg".to_string(),
            filename: "audio.ogg".to_string(),
            data: b"ogg-bytes".to_vec(),
        };
        let ctx = DispatchContext {
            media: Some(&audio),
            ..context(&session)
        };

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .dispatch(&ctx, &three_candidate_row())
            .await
            .unwrap();

        assert_eq!(
            result.outcome,
            RowOutcome::Sent {
                address: ADDRESS_A.to_string()
            }
        );
        assert_eq!(session.checked(), vec![ADDRESS_A.to_string()]);
        let sent = session.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ADDRESS_A);
        assert!(matches!(sent[0].1, MessagePayload::Text(_)));

        let outcomes: Vec<SendOutcome> = store
            .send_log_for(TENANT, "333")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.outcome)
            .collect();
        assert_eq!(outcomes, vec![SendOutcome::Sent]);
        let contact = store.get_contact(TENANT, "333").await.unwrap().unwrap();
        assert_eq!(contact.chosen_address, ADDRESS_A);
    }

    #[test]
    async fn test_all_present_candidates_failing_is_not_counted_as_no_whatsapp() {
        let store = SqliteContactStore::in_memory();
        let session = FakeSession::connected(TENANT)
            .with_registered(&[ADDRESS_A, ADDRESS_B])
            .with_failing(&[ADDRESS_A, ADDRESS_B]);

        let result = dispatcher(&store, RecencyPolicy::BlockWholeRow)
            .dispatch(&context(&session), &three_candidate_row())
            .await
            .unwrap();

        assert_eq!(result.outcome, RowOutcome::DeliveryFailed);
        assert_eq!(result.failed_attempts, 2);
        let outcomes: Vec<SendOutcome> = store
            .send_log_for(TENANT, "333")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.outcome)
            .collect();
        assert_eq!(outcomes, vec![SendOutcome::Failed, SendOutcome::Failed]);

        let mut stats = CampaignStats::default();
        stats.record(&result.outcome);
        stats.failed += result.failed_attempts;
        assert_eq!(stats.no_channel_presence, 0);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.processed, 1);
    }
}
