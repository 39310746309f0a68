//! # Field Game Client Library
//!
//! Client side of a small shared-field game: every player owns one row in a
//! hosted `players` table, moves a square around an 800 x 600 field, and sees
//! everyone else through the table's change feed. There is no game server;
//! the hosted table is the only shared state and the last write wins.
//!
//! ## Module Organization
//!
//! - [`game`]: fixed-timestep integration of held keys into the local position
//! - [`sync`]: debounced write-through of the local row to the table
//! - [`realtime`]: change-feed subscription and the roster feed task
//! - [`roster`]: local copy of the table keyed by row identity
//! - [`database`]: REST access to the table
//! - [`app`]: join / play / leave session flow, driven once per frame
//! - [`input`], [`login`], [`rendering`]: keyboard, name prompt and drawing
//!
//! ## Frame Loop
//!
//! ```rust,ignore
//! let mut app = App::new(runtime.handle().clone(), store, settings).with_backend(backend);
//! loop {
//!     let (keys, controls) = input.update();
//!     let join_name = app.login_mut().update();
//!     app.update(Instant::now(), FrameInput { keys, controls, join_name });
//!     renderer.render_field(app.roster());
//!     next_frame().await;
//! }
//! ```

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod game;
pub mod input;
pub mod login;
pub mod realtime;
pub mod rendering;
pub mod roster;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ClientError, Result};
