//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter       | Implements    | Connects to                  |
//! |---------------|---------------|------------------------------|
//! | `serial`      | Link          | USB serial port (serialport) |
//! | `shared_link` | CommandSink   | one locked `Link`            |
//! | `clock`       | WallClock     | host local time (chrono)     |

pub mod clock;
pub mod serial;
pub mod shared_link;
