pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    dim, file_failed, file_skipped, header, human_bytes, info, loss,
    section, success, summary_row, timing, warn,
};
pub use progress::{ProgressManager, Spinner};
pub use progress_message::{ProgressMessage, ProgressPhase};
pub use table::{formats_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
