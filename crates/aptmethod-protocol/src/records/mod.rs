//! Typed records, one per status code.
//!
//! | code | record |
//! |------|--------|
//! | 100 | [`Capabilities`] |
//! | 101, 102, 104, 401 | [`Log`], [`Status`], [`Warning`], [`GeneralFailure`] |
//! | 103 | [`Redirect`] |
//! | 200, 201, 400 | [`UriStart`], [`UriDone`], [`UriFailure`] |
//! | 351 | [`AuxRequest`] |
//! | 402, 602 | [`AuthorizationRequired`], [`AuthorizationCredentials`] |
//! | 403, 603 | [`MediaFailure`], [`MediaChanged`] |
//! | 600 | [`UriAcquire`], seen by handlers as a [`Request`] |
//! | 601 | [`Configuration`] |

mod authz;
mod handshake;
mod media;
mod misc;
mod text;
mod uri;

pub use authz::{AuthorizationCredentials, AuthorizationRequired};
pub use handshake::{Capabilities, Configuration};
pub use media::{MediaChanged, MediaFailure};
pub use misc::{AuxRequest, Redirect};
pub use text::{GeneralFailure, Log, Status, Warning};
pub use uri::{Request, UriAcquire, UriDone, UriFailure, UriStart};
