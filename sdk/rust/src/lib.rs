//! Client side of the portfolio contact form.
//!
//! `ContactClient` talks to the relay over HTTP; `ContactForm` is the
//! controller a page binds its inputs, submit button and status line to.

pub mod client;
pub mod form;

pub use client::{ClientError, ContactClient, ContactDraft, ContactTransport, SendEmailResponse};
pub use form::{ContactForm, Field, FormError, FormStatus};
