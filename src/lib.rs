//! Evsim is a discrete-event simulation kernel with typed, expression-valued entity parameters. The kernel consists of
//! a future event set ordered by time, priority and insertion sequence, a driver dispatching events to user-defined
//! components, and a parameter subsystem where values can be literals or expressions shared between entities.
//!
//! ## Contents
//!
//! - [Basic Concepts](crate#basic-concepts)
//! - [Example](crate#example)
//! - [Parameters](crate#parameters)
//! - [Logging](crate#logging)
//!
//! ## Basic Concepts
//!
//! **Component.** A component represents a part of the model with some internal state and execution logic. Each
//! component is assigned a unique _identifier_ which can be used to emit events for this component. A component
//! accesses the simulation state and emits events via its [`SimulationContext`] and receives events by implementing
//! [`EventHandler`].
//!
//! **Event.** An event contains a timestamp, a priority, identifiers of event source and destination, the identifier
//! of the event during whose processing it was emitted, and a user-defined _payload_. Pending events are kept in the
//! [`FutureEventSet`] and processed in the order of increasing time, then increasing priority value, then insertion
//! order. This order is total, so simulation runs are reproducible for the same seed. Pending events can be cancelled
//! or rescheduled, but never into the past.
//!
//! **Simulation.** [`Simulation`] advances the simulation clock to the timestamp of the next event and invokes the
//! destination component. Handler failures are not swallowed: they stop the step and are returned to the caller as
//! [`SimulationError`](error::SimulationError) carrying the event id and time.
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde::Serialize;
//! use evsim::{cast, Event, EventHandler, HandlerResult, Id, Simulation, SimulationContext};
//!
//! #[derive(Clone, Serialize)]
//! struct Request {
//!     time: f64,
//! }
//!
//! #[derive(Clone, Serialize)]
//! struct Response {
//!     req_time: f64,
//! }
//!
//! struct Process {
//!     net_delay: f64,
//!     ctx: SimulationContext,
//! }
//!
//! impl Process {
//!     fn send_request(&self, dst: Id) {
//!         self.ctx.emit(Request { time: self.ctx.time() }, dst, self.net_delay);
//!     }
//! }
//!
//! impl EventHandler for Process {
//!     fn on(&mut self, event: Event) -> HandlerResult {
//!         cast!(match event.data {
//!             Request { time } => {
//!                 let proc_delay = self.ctx.gen_range(0.5..1.0);
//!                 self.ctx.emit(Response { req_time: time }, event.src, proc_delay + self.net_delay);
//!             }
//!             Response { req_time } => {
//!                 println!("Response time: {:.2}", self.ctx.time() - req_time);
//!             }
//!         });
//!         Ok(())
//!     }
//! }
//!
//! fn main() {
//!     let mut sim = Simulation::new(123);
//!
//!     let proc1 = Rc::new(RefCell::new(Process { net_delay: 0.1, ctx: sim.create_context("proc1") }));
//!     sim.add_handler("proc1", proc1.clone());
//!     let proc2 = Rc::new(RefCell::new(Process { net_delay: 0.1, ctx: sim.create_context("proc2") }));
//!     let proc2_id = sim.add_handler("proc2", proc2);
//!
//!     proc1.borrow().send_request(proc2_id);
//!
//!     sim.step_until_no_events().unwrap();
//!     assert!(sim.time() >= 0.7);
//! }
//! ```
//!
//! ## Parameters
//!
//! Components describe their configuration with parameters ([`par::Par`]) grouped in a [`par::ParamSet`]. A
//! parameter is declared with a type and optional default, assigned a literal or an expression (from code or from a
//! [`SimulationConfig`]), and finalized when the component is initialized. Expressions may reference sibling
//! parameters, `index`, `sizeof(vector)` and random functions drawing from the simulation random number generator.
//! Volatile parameters keep their expression and are re-evaluated on every read:
//!
//! ```rust
//! use evsim::par::{ParDecl, ParType, ParamSet};
//! use evsim::{ParAssignments, Simulation};
//!
//! let mut sim = Simulation::new(42);
//! let ctx = sim.create_context("source");
//!
//! let mut assignments = ParAssignments::new();
//! assignments.push("source.interval", "exponential(mean)").unwrap();
//!
//! let mut params = ParamSet::for_context(&ctx);
//! params.declare(ParDecl::new("mean", ParType::Double).default_value("2.0")).unwrap();
//! params.declare(ParDecl::new("interval", ParType::Double).volatile()).unwrap();
//! params.initialize(&assignments).unwrap();
//!
//! let a = params.double("interval").unwrap();
//! let b = params.double("interval").unwrap();
//! assert!(a >= 0.0 && b >= 0.0 && a != b);
//! ```
//!
//! ## Logging
//!
//! Evsim logs through the [`log`](https://crates.io/crates/log) facade and never installs a logger itself. Components
//! can use the [`log_info!`] family of macros which prefix messages with the simulation time and component name and
//! use the component name as log target.

#![warn(missing_docs)]
#![allow(clippy::needless_doctest_main)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod expr;
pub mod fes;
pub mod handler;
pub mod log;
pub mod par;
pub mod simulation;
mod state;

pub use colored;
#[doc(hidden)]
pub use ::log as __log;

pub use component::Id;
pub use config::{AssignedValue, ConfigError, ParAssignment, ParAssignments, SimulationConfig};
pub use context::{RandomSource, SimulationContext};
pub use error::{ScheduleError, SimulationError};
pub use event::{Event, EventData, EventId, EventKey};
pub use fes::FutureEventSet;
pub use handler::{EventCancellationPolicy, EventHandler, HandlerResult};
pub use simulation::{RunOutcome, Simulation};
pub use state::EPSILON;
