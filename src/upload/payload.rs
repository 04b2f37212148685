//! Outgoing multipart payload.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};

use crate::Result;

/// Field name for files of `slot`. The server groups uploads by this key.
pub fn slot_key(slot: usize) -> String {
    format!("images[{slot}]")
}

#[derive(Clone, Debug)]
pub struct FilePart {
    pub key: String,
    pub slot: usize,
    pub file_name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Clone, Debug, Default)]
pub struct PayloadDescriptor {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl PayloadDescriptor {
    pub fn files_for_slot(&self, slot: usize) -> impl Iterator<Item = &FilePart> {
        self.files.iter().filter(move |f| f.slot == slot)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn into_form(self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let part = Part::bytes(file.bytes.to_vec()).file_name(file.file_name).mime_str(&file.media_type)?;
            form = form.part(file.key, part);
        }
        Ok(form)
    }
}
