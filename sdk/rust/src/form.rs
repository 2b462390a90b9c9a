//! Contact form controller.
//!
//! Holds the draft a page binds its inputs to, runs the submission and
//! exposes the busy flag and the terminal status. One form instance never
//! has more than one request in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::client::{ContactDraft, ContactTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Message,
}

/// What the page shows under the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormStatus {
    #[default]
    Idle,
    Success,
    Error,
}

/// Reasons `submit` refused to send anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("a submission is already in flight")]
    Busy,

    #[error("{0:?} is empty or malformed")]
    Invalid(Field),
}

pub struct ContactForm<T> {
    transport: T,
    draft: Mutex<ContactDraft>,
    status: Mutex<FormStatus>,
    busy: AtomicBool,
}

/// Clears the busy flag when dropped, including when the submit future is
/// cancelled mid-request.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: ContactTransport> ContactForm<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            draft: Mutex::new(ContactDraft::default()),
            status: Mutex::new(FormStatus::Idle),
            busy: AtomicBool::new(false),
        }
    }

    /// Update one field from its input control.
    pub fn set_field(&self, field: Field, value: impl Into<String>) {
        let mut draft = self.draft.lock().expect("form draft mutex poisoned");
        let slot = match field {
            Field::Name => &mut draft.name,
            Field::Email => &mut draft.email,
            Field::Message => &mut draft.message,
        };
        *slot = value.into();
    }

    pub fn draft(&self) -> ContactDraft {
        self.draft.lock().expect("form draft mutex poisoned").clone()
    }

    pub fn status(&self) -> FormStatus {
        *self.status.lock().expect("form status mutex poisoned")
    }

    /// Drives the disabled state of the submit button.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Submit the current draft.
    ///
    /// Returns `FormError::Busy` without sending while a previous submit is
    /// pending. Any transport failure, non-2xx answer or `success: false`
    /// becomes `FormStatus::Error`; success also clears the draft.
    pub async fn submit(&self) -> Result<FormStatus, FormError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FormError::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        let draft = self.draft();
        check_shape(&draft)?;
        self.set_status(FormStatus::Idle);

        let status = match self.transport.send(&draft).await {
            Ok(_) => {
                *self.draft.lock().expect("form draft mutex poisoned") = ContactDraft::default();
                FormStatus::Success
            }
            Err(_) => FormStatus::Error,
        };
        self.set_status(status);
        Ok(status)
    }

    fn set_status(&self, status: FormStatus) {
        *self.status.lock().expect("form status mutex poisoned") = status;
    }
}

/// Browser-level checks: every field filled, email looks like `a@b`.
/// The relay applies the strict rules.
fn check_shape(draft: &ContactDraft) -> Result<(), FormError> {
    if draft.name.trim().is_empty() {
        return Err(FormError::Invalid(Field::Name));
    }
    let looks_like_email = match draft.email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !draft.email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !looks_like_email {
        return Err(FormError::Invalid(Field::Email));
    }
    if draft.message.trim().is_empty() {
        return Err(FormError::Invalid(Field::Message));
    }
    Ok(())
}
