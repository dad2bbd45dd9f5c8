//! Resumable Core
//!
//! This crate provides the core runtime for the Resumable reactive UI
//! framework. It implements:
//!
//! - Reactive primitives (signals, computed values, effects, batching)
//! - A template engine that parses markup once and updates only what changed
//! - Keyed list reconciliation that preserves node identity
//! - Server-side rendering and client-side hydration of components
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signals, computed values, effects and the runtime that
//!   schedules them
//! - `dom`: the in-memory document the templates render into
//! - `template`: template parsing, the blueprint cache and the part update
//!   engine
//! - `ssr`: rendering templates and components to HTML plus hydration data
//! - `component`: component definitions, mounting and hydration
//!
//! # Example
//!
//! ```rust
//! use resumable_core::dom::Document;
//! use resumable_core::html;
//! use resumable_core::reactive::Runtime;
//! use resumable_core::template::RenderRoot;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let rt = Runtime::new();
//! let doc = Document::new();
//! let root = Rc::new(RefCell::new(RenderRoot::new(doc.create_element("main"))));
//!
//! let count = rt.signal(0);
//! let _view = rt.effect({
//!     let (count, root) = (count.clone(), root.clone());
//!     move || {
//!         let _ = root.borrow_mut().render(&html!("<p>Count: ", count.get(), "</p>"));
//!     }
//! });
//!
//! count.set(5);
//! assert_eq!(root.borrow().container().text_content(), "Count: 5");
//! ```

pub mod component;
pub mod dom;
pub mod reactive;
pub mod ssr;
pub mod template;

pub use component::{hydrate_all, ComponentDef, ComponentRegistry, MountedComponent};
pub use reactive::{Computed, Effect, Runtime, Signal};
pub use ssr::{render_component, render_to_string};
pub use template::{repeat, TemplateResult, Value};
