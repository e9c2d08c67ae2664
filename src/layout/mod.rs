//! Layout Module
//!
//! Flexbox layout computation for the shadow tree using Taffy.
//!
//! # Architecture
//!
//! The layout module uses [Taffy](https://github.com/DioxusLabs/taffy) for
//! W3C-compliant flexbox computation. The bridge:
//!
//! 1. Converts shadow node styles → Taffy styles
//! 2. Builds a Taffy tree from the non-virtual part of one root
//! 3. Calls measure functions for content-sized leaves
//! 4. Writes computed frames back onto the shadow nodes

mod taffy_bridge;

pub use taffy_bridge::calculate_layout;
