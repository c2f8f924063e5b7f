//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                                   |
//! |-----------------|-----------------------------------------------------|
//! | `project`       | `Init`, `Status`                                   |
//! | `run`           | `Run`                                              |
//! | `reviews`       | `Reviews`, `Review`, `Dashboard`, `Export`         |
//! | `versions`      | `Versions`, `Stats`, `Finalize`, `Publication`     |

pub mod project;
pub mod reviews;
pub mod run;
pub mod versions;

pub use project::{cmd_init, cmd_status};
pub use reviews::{
    cmd_dashboard, cmd_export, cmd_review_assign, cmd_review_complete, cmd_review_reject,
    cmd_review_show, cmd_reviews,
};
pub use run::cmd_run;
pub use versions::{cmd_finalize, cmd_publication, cmd_stats, cmd_versions};
