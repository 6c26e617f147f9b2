// ironbee_rust/src/core/collection/handlers.rs
use super::CollectionHandler;
use crate::core::exception::{CoreError, CoreResult};
use crate::core::field::{Field, FieldRef, FieldValue};
use crate::core::mem::OpaqueData;
use std::path::PathBuf;
use std::sync::Arc;

/// `vars:` — a collection seeded from literal `key=value` parameters.
/// Nothing is written back at persist time.
#[derive(Debug)]
pub struct VarsHandler;

#[derive(Debug)]
struct VarsData {
    pairs: Vec<(String, String)>,
}

impl CollectionHandler for VarsHandler {
    fn kind(&self) -> &str {
        "vars"
    }

    fn selection(&self, _name: &str, params: &[String]) -> CoreResult<Option<OpaqueData>> {
        match params.first().map(String::as_str) {
            Some("vars:") => {}
            _ => return Ok(None),
        }
        let mut pairs = Vec::with_capacity(params.len() - 1);
        for p in &params[1..] {
            let Some((k, v)) = p.split_once('=') else {
                return Err(CoreError::InvalidArgument(format!(
                    "vars collection parameter '{p}' is not key=value"
                )));
            };
            pairs.push((k.to_string(), v.to_string()));
        }
        Ok(Some(Arc::new(VarsData { pairs })))
    }

    fn populate(&self, _name: &str, data: &OpaqueData, list: &FieldRef) -> CoreResult<()> {
        let Some(vars) = data.downcast_ref::<VarsData>() else {
            return Err(CoreError::Other("vars handler data mismatch".to_string()));
        };
        let mut guard = list.lock().expect("Mutex poisoned");
        let children = guard
            .as_list_mut()
            .ok_or_else(|| CoreError::Incompatible("collection field is not a list".to_string()))?;
        for (k, v) in &vars.pairs {
            children.push(Field::bytes(k.as_bytes().to_vec(), v.as_bytes().to_vec()).into_ref());
        }
        Ok(())
    }

    fn persist(&self, _name: &str, _data: &OpaqueData, _list: &FieldRef) -> CoreResult<()> {
        Ok(())
    }
}

/// `json-file://<path>` — a collection loaded from and persisted to a
/// JSON object on disk. Values round-trip as strings and numbers; other
/// member kinds are dropped on write.
#[derive(Debug)]
pub struct JsonFileHandler;

#[derive(Debug)]
struct JsonFileData {
    path: PathBuf,
}

const JSON_FILE_SCHEME: &str = "json-file://";

impl CollectionHandler for JsonFileHandler {
    fn kind(&self) -> &str {
        "json-file"
    }

    fn selection(&self, _name: &str, params: &[String]) -> CoreResult<Option<OpaqueData>> {
        let Some(uri) = params.first() else {
            return Ok(None);
        };
        let Some(path) = uri.strip_prefix(JSON_FILE_SCHEME) else {
            return Ok(None);
        };
        if path.is_empty() {
            return Err(CoreError::InvalidArgument(
                "json-file collection URI has no path".to_string(),
            ));
        }
        Ok(Some(Arc::new(JsonFileData {
            path: PathBuf::from(path),
        })))
    }

    fn populate(&self, name: &str, data: &OpaqueData, list: &FieldRef) -> CoreResult<()> {
        let Some(file) = data.downcast_ref::<JsonFileData>() else {
            return Err(CoreError::Other("json-file handler data mismatch".to_string()));
        };
        let text = match std::fs::read_to_string(&file.path) {
            Ok(text) => text,
            // A collection that has never been persisted starts empty.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(CoreError::Other(format!(
                    "reading collection '{name}' from {}: {e}",
                    file.path.display()
                )))
            }
        };
        let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            CoreError::Other(format!(
                "parsing collection '{name}' from {}: {e}",
                file.path.display()
            ))
        })?;
        let Some(object) = value.as_object() else {
            return Err(CoreError::Other(format!(
                "collection '{name}' file is not a JSON object"
            )));
        };
        let mut guard = list.lock().expect("Mutex poisoned");
        let children = guard
            .as_list_mut()
            .ok_or_else(|| CoreError::Incompatible("collection field is not a list".to_string()))?;
        for (k, v) in object {
            let field = match v {
                serde_json::Value::String(s) => {
                    Field::bytes(k.as_bytes().to_vec(), s.as_bytes().to_vec())
                }
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => Field::num(k.as_bytes().to_vec(), i),
                    None => Field::float(k.as_bytes().to_vec(), n.as_f64().unwrap_or(0.0)),
                },
                serde_json::Value::Bool(b) => Field::num(k.as_bytes().to_vec(), *b as i64),
                _ => continue,
            };
            children.push(field.into_ref());
        }
        Ok(())
    }

    fn persist(&self, name: &str, data: &OpaqueData, list: &FieldRef) -> CoreResult<()> {
        let Some(file) = data.downcast_ref::<JsonFileData>() else {
            return Err(CoreError::Other("json-file handler data mismatch".to_string()));
        };
        let mut object = serde_json::Map::new();
        {
            let guard = list.lock().expect("Mutex poisoned");
            let children = guard.as_list().ok_or_else(|| {
                CoreError::Incompatible("collection field is not a list".to_string())
            })?;
            for child in children {
                let child = child.lock().expect("Mutex poisoned");
                let key = String::from_utf8_lossy(child.name()).into_owned();
                let value = match &child.value {
                    FieldValue::Bytes(b) => {
                        serde_json::Value::String(String::from_utf8_lossy(b).into_owned())
                    }
                    FieldValue::Str(s) => serde_json::Value::String(s.clone()),
                    FieldValue::Num(n) => serde_json::Value::Number((*n).into()),
                    FieldValue::Float(f) => match serde_json::Number::from_f64(*f) {
                        Some(n) => serde_json::Value::Number(n),
                        None => continue,
                    },
                    _ => continue,
                };
                object.insert(key, value);
            }
        }
        let text = serde_json::to_string_pretty(&serde_json::Value::Object(object))
            .map_err(|e| CoreError::Other(format!("serializing collection '{name}': {e}")))?;
        std::fs::write(&file.path, text).map_err(|e| {
            CoreError::Other(format!(
                "writing collection '{name}' to {}: {e}",
                file.path.display()
            ))
        })
    }
}
