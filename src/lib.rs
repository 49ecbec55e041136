//! API Mock State Engine
//!
//! Per-client mock state and matching engine for an API mocking service.
//! Many test clients, each identified by a client id (`ngApimockId`), can
//! share one server without seeing each other's scenario selections,
//! delays, echo flags or variables.
//!
//! # Features
//!
//! - **Mock Catalog**: Validated mock definitions, matched in definition order
//! - **Scenarios**: Per-client selection of the named response a mock returns
//! - **Delay & Echo**: Per-client artificial latency and request echoing
//! - **Variables**: `{{name}}` substitution, client-scoped with global fallback
//!
//! # Example Configuration
//!
//! ```yaml
//! mocks:
//!   - name: greet
//!     request:
//!       method: GET
//!       url: ^/greet$
//!     responses:
//!       default:
//!         default: true
//!         body:
//!           type: text
//!           content: "Hello {{name}}"
//!       loud:
//!         body:
//!           type: text
//!           content: "HELLO {{name}}!!"
//! ```

pub mod catalog;
pub mod config;
pub mod echo;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod server;
pub mod state;
pub mod template;
pub mod variables;

pub use catalog::{Mock, MockCatalog};
pub use config::MockServerConfig;
pub use echo::{EchoSink, IncomingRequest};
pub use engine::{MatchingEngine, RenderedResponse};
pub use error::{RenderError, StateError, ValidationError};
pub use server::MockServer;
pub use state::{ClientId, MockState};
