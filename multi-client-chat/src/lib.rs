//! Multi-client TCP chat server with a small slash-command protocol.
//!
//! One task owns every piece of shared state. Connections get a reader task
//! that frames lines and a writer task that drains an outbound queue; both
//! talk to the owner over channels, so no locks are involved.
//!
//! - [`cli`] parses the command-line interface for every mode.
//! - [`registry`] is the fixed-capacity session table: names, ids, slots.
//! - [`command`] classifies a received line as chat or a `/` command.
//! - [`delivery`] sends rendered messages to one session or broadcasts them.
//! - [`server`] runs the accept/dispatch loop and executes commands.
//! - [`message`] renders server replies and frames lines on the wire.
//! - [`client`] is the interactive terminal client.
//! - [`echo`] and [`hex`] are the echo server/client pair and its hex dump.

pub mod cli;
pub mod client;
pub mod command;
pub mod delivery;
pub mod echo;
pub mod hex;
pub mod message;
pub mod registry;
pub mod server;
