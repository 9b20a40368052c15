/*!
# DataVis Canvas

Upload a spreadsheet, chart it, and come back to the chart later.

## Overview

Each signed-in identity owns a set of uploaded datasets, an active file,
a chart selection and a list of saved analyses. All of it is persisted in a
string key/value store under identity-scoped keys, so a returning user
picks up where they left off. A URL can carry a deep link (`fileName`,
`chartType`, `chartDimension`, `xAxis`, `yAxis`) that overrides the restored
selection once; the parameters are stripped right after.

## Architecture

### Core
- **storage**: key/value store trait, identity scoping, corrupt-record recovery
- **saving**: gzip + bincode snapshot file backing the store
- **dataset**, **chart**: rows, cells and the chart selection
- **deeplink**: URL parameter encoding and decoding
- **history**: saved analyses
- **login**: identity and the persisted sign-in record
- **loader**: CSV and Excel parsing of uploads
- **suggest**: AI suggestion requests
- **downloader**: PNG and PDF export
- **reconciler**: the [`Workspace`] that ties the above together

### Web (`web` feature)
- **graph**: plotters renderer
- **app**: axum routes, cookie sessions

## Reconciliation

1. On identity change the active file and dataset store are read; the
   active dataset is loaded only if the store still holds it.
2. On URL change a deep link may switch the active file (if the identity
   uploaded it) and then overwrite chart fields.
3. Answers to suggestion requests are dropped once the dataset they were
   asked about is gone.
*/

pub mod chart;
pub mod config;
pub mod dataset;
pub mod deeplink;
pub mod downloader;
pub mod error;
pub mod history;
pub mod loader;
pub mod login;
pub mod notify;
pub mod reconciler;
pub mod saving;
pub mod storage;
pub mod suggest;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;

pub use chart::{ChartConfig, ChartDimension, ChartType};
pub use dataset::{Dataset, DatasetStore, Row, Scalar};
pub use deeplink::DeepLink;
pub use error::{DatavisError, Result};
pub use history::{HistoryEntry, HistoryManager};
pub use login::Identity;
pub use notify::{Notification, Severity};
pub use reconciler::{Navigation, Phase, Workspace};
pub use storage::{KeyValueStore, MemoryStore};
