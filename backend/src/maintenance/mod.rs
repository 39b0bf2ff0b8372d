//! Background upkeep for the uploads directory.
//!
//! Images are written before the document references them, so a crash in
//! between leaves a file nothing points to. When enabled through
//! `--sweep-interval-secs`, the sweeper deletes such files periodically.

pub mod sweeper;
