//! Gmail Triage Assistant
//!
//! A conversational assistant that searches, inspects and permanently deletes
//! Gmail messages on the user's behalf.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 desktop flow with a cached, auto-refreshed token
//! - **Delete Operation**: deletion by id list or search query, with dry-run
//!   simulation and per-message error accumulation
//! - **Tools**: search, read and delete exposed to a chat model as JSON tools
//! - **Agent**: tool-calling loop with retries, per-thread memory and summarization
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_triage::{auth::InstalledFlowProvider, client::ProductionGmailClient};
//! use gmail_triage::delete::{DeleteConfig, DeleteOperation};
//! use gmail_triage::models::DeleteRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let credentials = InstalledFlowProvider::new(
//!         "credentials/client_secret.json",
//!         "credentials/token.json",
//!     );
//!     let client = ProductionGmailClient::new(credentials.hub().await?);
//!
//!     let operation = DeleteOperation::new(client, DeleteConfig::default());
//!     let report = operation
//!         .execute(&DeleteRequest::by_query("category:promotions older_than:1y", 20).simulated(true))
//!         .await?;
//!
//!     println!("Would delete {} messages", report.simulated_count);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`agent`] - Chat model abstraction and the tool-calling loop
//! - [`auth`] - OAuth2 credentials and Gmail hub construction
//! - [`cli`] - Command-line interface, REPL and batch driver
//! - [`client`] - Gmail API client behind the [`client::MailProvider`] trait
//! - [`config`] - Configuration file and environment overrides
//! - [`delete`] - The Delete Operation
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures
//! - [`tools`] - Tools exposed to the agent

pub mod agent;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod delete;
pub mod error;
pub mod models;
pub mod tools;

pub use delete::{DeleteConfig, DeleteOperation};
pub use error::{DeleteError, Result, TriageError};
pub use models::{AgentResponse, DeleteReport, DeleteRequest, MessageOutcome, OutcomeStatus};
