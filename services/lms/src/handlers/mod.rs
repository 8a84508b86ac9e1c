pub mod announcement;
pub mod badge;
pub mod course;
pub mod dashboard;
pub mod my_course;
pub mod payment;
pub mod user;

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use serde::Serialize;

use ednova_auth_types::identity::SessionUser;

use crate::domain::types::Upload;
use crate::error::LmsError;
use crate::usecase::access::Caller;

pub fn caller(user: &SessionUser) -> Caller {
    Caller {
        user_id: user.user_id,
        role: user.role,
    }
}

pub fn require_admin(user: &SessionUser) -> Result<(), LmsError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(LmsError::Forbidden)
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn bad_form(e: MultipartError) -> LmsError {
    LmsError::validation(format!("malformed multipart form: {}", e.body_text()))
}

/// A fully read `multipart/form-data` body: text fields and attached files.
#[derive(Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, LmsError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned();
                    let bytes = field.bytes().await.map_err(bad_form)?;
                    if !bytes.is_empty() {
                        form.files.insert(
                            name,
                            Upload {
                                file_name,
                                content_type,
                                bytes,
                            },
                        );
                    }
                }
                None => {
                    let text = field.text().await.map_err(bad_form)?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn required(&self, name: &str) -> Result<String, LmsError> {
        self.text(name)
            .ok_or_else(|| LmsError::validation(format!("{name} is required")))
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, LmsError> {
        match self.fields.get(name).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| LmsError::validation(format!("{name} is not valid"))),
        }
    }

    pub fn parse_required<T: FromStr>(&self, name: &str) -> Result<T, LmsError> {
        self.parse(name)?
            .ok_or_else(|| LmsError::validation(format!("{name} is required")))
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }

    pub fn require_file(&mut self, name: &str) -> Result<Upload, LmsError> {
        self.take_file(name)
            .ok_or_else(|| LmsError::validation(format!("{name} file is required")))
    }
}
