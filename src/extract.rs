//! Field extraction from terminated frames

use log::trace;
use std::collections::HashMap;

use crate::error::ScanError;
use crate::frame::Frame;
use crate::probe::{FieldPattern, StatusCheck};

pub struct ResultExtractor;

impl ResultExtractor {
    /// Named terminator captures first, then each field pattern. A pattern
    /// that does not match leaves its field absent; a matching pattern
    /// overrides a capture of the same name.
    pub fn extract(frame: &Frame, patterns: &[FieldPattern]) -> HashMap<String, String> {
        let mut fields = frame.named_groups().clone();
        let text = frame.text();

        for pattern in patterns {
            match pattern.apply(&text) {
                Some(value) => {
                    trace!("Field {} = {:?}", pattern.name(), value);
                    fields.insert(pattern.name().to_string(), value);
                }
                None => trace!("Field {} absent", pattern.name()),
            }
        }

        fields
    }

    /// Compare the step's status field against its success codes
    pub fn check_status(fields: &HashMap<String, String>, check: &StatusCheck) -> crate::Result<()> {
        let code = fields
            .get(&check.field)
            .ok_or_else(|| ScanError::MissingStatusField(check.field.clone()))?;

        if check.accepts(code) {
            Ok(())
        } else {
            Err(ScanError::Application {
                field: check.field.clone(),
                code: code.trim().to_string(),
                expected: check.success_codes.clone(),
            })
        }
    }
}
