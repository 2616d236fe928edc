//! services/tenant_files.rs
//! Archivos por tenant: listas subidas, media de la campaña y texto guardado.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};

use crate::models::{
    campaign_model::{CellValue, MediaAttachment, MediaKind},
    command_model::DeleteTarget,
};

/// Lista que usan los comandos `.envio` / `.enviar`
pub const DEFAULT_LIST_FILE: &str = "lista.json";
const TEMPLATE_FILE: &str = "mensagem.json";
const IMAGE_STEM: &str = "imagem";
const AUDIO_FILE: &str = "audio.ogg";
const IMAGE_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

/// Deja solo caracteres seguros para usar como nombre de carpeta/archivo.
pub fn sanitize_identifier(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn sanitize_file_name(name: &str) -> Result<String> {
    let file_name = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| anyhow!("Nombre de archivo inválido: '{}'", name))?;
    if file_name.starts_with('.') {
        return Err(anyhow!("Nombre de archivo inválido: '{}'", name));
    }
    Ok(file_name)
}

#[derive(Debug, Clone)]
pub struct TenantFiles {
    base_dir: PathBuf,
}

impl TenantFiles {
    pub fn new(base_dir: PathBuf) -> Self {
        TenantFiles { base_dir }
    }

    pub fn tenant_dir(&self, tenant: &str) -> Result<PathBuf> {
        let key = sanitize_identifier(tenant);
        if key.is_empty() {
            return Err(anyhow!("Identificador de tenant vacío"));
        }
        let dir = self.base_dir.join(key);
        fs::create_dir_all(&dir).with_context(|| format!("No se pudo crear {:?}", dir))?;
        Ok(dir)
    }

    pub fn save_list(&self, tenant: &str, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.tenant_dir(tenant)?.join(sanitize_file_name(file_name)?);
        fs::write(&path, data).with_context(|| format!("No se pudo guardar la lista en {:?}", path))?;
        log::info!("(save_list) Lista guardada en {:?} ({} bytes)", path, data.len());
        Ok(path)
    }

    /// Lee una lista JSON (arreglo de filas; la primera es el encabezado).
    pub fn read_list(&self, tenant: &str, file_name: &str) -> Result<Option<Vec<Vec<CellValue>>>> {
        let path = self.tenant_dir(tenant)?.join(sanitize_file_name(file_name)?);
        if !path.is_file() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).with_context(|| format!("No se pudo leer {:?}", path))?;
        let rows: Vec<Vec<serde_json::Value>> =
            serde_json::from_str(&raw).with_context(|| format!("Lista con formato inválido: {:?}", path))?;

        Ok(Some(
            rows.iter()
                .map(|row| row.iter().map(CellValue::from_json).collect())
                .collect(),
        ))
    }

    /// Guarda la media de la campaña. Las imágenes reemplazan a la imagen anterior.
    pub fn save_media(&self, tenant: &str, mimetype: &str, data: &[u8]) -> Result<PathBuf> {
        let dir = self.tenant_dir(tenant)?;
        let mimetype = mimetype.trim().to_lowercase();

        let file_name = if let Some(subtype) = mimetype.strip_prefix("image/") {
            let ext = subtype.split(';').next().unwrap_or("jpeg").trim();
            if !IMAGE_EXTENSIONS.contains(&ext) {
                return Err(anyhow!("Tipo de imagen no soportado: {}", mimetype));
            }
            for old in IMAGE_EXTENSIONS {
                let _ = fs::remove_file(dir.join(format!("{}.{}", IMAGE_STEM, old)));
            }
            format!("{}.{}", IMAGE_STEM, ext)
        } else if mimetype.starts_with("audio/") {
            AUDIO_FILE.to_string()
        } else {
            return Err(anyhow!("Tipo de media no soportado: {}", mimetype));
        };

        let path = dir.join(file_name);
        fs::write(&path, data).with_context(|| format!("No se pudo guardar la media en {:?}", path))?;
        log::info!("(save_media) Media guardada en {:?} ({} bytes)", path, data.len());
        Ok(path)
    }

    /// Media a adjuntar: la imagen tiene prioridad sobre el audio.
    pub fn resolve_media(&self, tenant: &str) -> Result<Option<MediaAttachment>> {
        let dir = self.tenant_dir(tenant)?;

        for ext in IMAGE_EXTENSIONS {
            let filename = format!("{}.{}", IMAGE_STEM, ext);
            let path = dir.join(&filename);
            if path.is_file() {
                let data = fs::read(&path).with_context(|| format!("No se pudo leer {:?}", path))?;
                let subtype = if ext == "jpg" { "jpeg" } else { ext };
                return Ok(Some(MediaAttachment {
                    kind: MediaKind::Image,
                    mimetype: format!("image/{}", subtype),
                    filename,
                    data,
                }));
            }
        }

        let audio_path = dir.join(AUDIO_FILE);
        if audio_path.is_file() {
            let data = fs::read(&audio_path).with_context(|| format!("No se pudo leer {:?}", audio_path))?;
            return Ok(Some(MediaAttachment {
                kind: MediaKind::Audio,
                mimetype: "audio/ogg; codecs=opus".to_string(),
                filename: AUDIO_FILE.to_string(),
                data,
            }));
        }

        Ok(None)
    }

    pub fn save_template(&self, tenant: &str, text: &str) -> Result<()> {
        let path = self.tenant_dir(tenant)?.join(TEMPLATE_FILE);
        let json = serde_json::to_string_pretty(text)?;
        fs::write(&path, json).with_context(|| format!("No se pudo guardar {:?}", path))?;
        Ok(())
    }

    pub fn read_template(&self, tenant: &str) -> Result<Option<String>> {
        let path = self.tenant_dir(tenant)?.join(TEMPLATE_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("No se pudo leer {:?}", path))?;
        let text: String =
            serde_json::from_str(&raw).with_context(|| format!("Texto guardado inválido en {:?}", path))?;
        Ok(Some(text))
    }

    /// Borra media o lista. Devuelve el archivo borrado, o None si no había nada.
    pub fn delete(&self, tenant: &str, target: DeleteTarget) -> Result<Option<String>> {
        let dir = self.tenant_dir(tenant)?;
        let candidates: Vec<String> = match target {
            DeleteTarget::Audio => vec![AUDIO_FILE.to_string()],
            DeleteTarget::Image => IMAGE_EXTENSIONS
                .iter()
                .map(|ext| format!("{}.{}", IMAGE_STEM, ext))
                .collect(),
            DeleteTarget::List => vec![DEFAULT_LIST_FILE.to_string()],
        };

        for name in candidates {
            let path = dir.join(&name);
            if path.is_file() {
                fs::remove_file(&path).with_context(|| format!("No se pudo borrar {:?}", path))?;
                return Ok(Some(name));
            }
        }
        Ok(None)
    }
}
