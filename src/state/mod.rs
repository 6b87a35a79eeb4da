// SPDX-License-Identifier: MIT

//! Typed state persistence
//!
//! This module provides:
//! - `ModelSchema` - declared fields of a structured type
//! - `inspect` - shape classification of declared field types
//! - `encode` / `decode` - conversion between models and flat string maps

pub mod codec;
mod schema;
pub mod shape;

pub use codec::{decode, encode, FlatMap, EMPTY_LIST_MARKER, NULL_MARKER};
pub use schema::{
    DeclaredType, FieldDecl, Model, ModelSchema, ScalarKind, SchemaRef, StateModel,
};
pub use shape::{inspect, Shape, ShapeCategory};
