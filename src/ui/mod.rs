pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, info, muted, phase, step, success, summary_row, warn};
pub use progress::{finish_with_summary, Spinner};
pub use table::{EdgeRow, StepRow, name_list, render_table};
pub use theme::{is_quiet, set_quiet, theme, Theme};
