/*
 webp2gif animated WebP to GIF batch converter

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

#[macro_use] extern crate quick_error;

use serde::{Deserialize, Serialize};

mod error;
pub use crate::error::*;
pub mod batch;
pub mod color;
pub mod compose;
pub mod encode;
pub mod export;
pub mod job;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod quantize;
pub mod source;

pub use crate::batch::{convert_all, export_all, BatchConfig, BatchSummary, GifBatch, Layout, PngBatch};
pub use crate::compose::Compositing;
pub use crate::pipeline::{convert_file, Conversion};
pub use crate::pool::{serve_one_job, Parallelism, WORKER_ARG};
pub use crate::source::SourceImage;

/// How each file is converted. Same for every file in a batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Single-frame WebPs produce no GIF
    pub skip_static: bool,
    pub compositing: Compositing,
    /// Lets the GIF writer drop unused palette entries
    pub optimize: bool,
    /// Floyd-Steinberg dithering when mapping to the palette
    pub dither: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            skip_static: true,
            compositing: Compositing::Matte,
            optimize: true,
            dither: true,
        }
    }
}
