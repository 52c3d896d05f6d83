//! Volatile engines
//!
//! In-memory backends with no pool behind them. Their contents vanish when
//! the engine is dropped.
//!
//! | engine      | sorted | concurrent | storage                       |
//! |-------------|--------|------------|-------------------------------|
//! | `blackhole` | no     | yes        | none                          |
//! | `vsmap`     | yes    | no         | sorted `Vec` under an RwLock  |
//! | `vcmap`     | no     | yes        | `HashMap` under an RwLock     |

mod blackhole;
mod vcmap;
mod vsmap;

pub use blackhole::BlackholeEngine;
pub use vcmap::VcmapEngine;
pub use vsmap::VsmapEngine;
