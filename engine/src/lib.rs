/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The task graph execution engine: staleness oracle (§4.C), task scheduler (§4.D), parallelism
//! gate (§4.E), output registry (§4.G), depfile parsers (§4.H), and the `Session` object holding
//! the shared mutable state of §5.

pub mod depfile;
pub mod disk;
pub mod gate;
pub mod printer;
pub mod rebuild;
pub mod registry;
pub mod session;
pub mod task;

pub use disk::{DiskInterface, SystemDiskInterface};
pub use gate::Gate;
pub use printer::Printer;
pub use registry::{DuplicateOutput, OutputRegistry};
pub use rebuild::{needs_rerun, RebuildError, RebuildInputs};
pub use session::{Counters, Session};
pub use task::{run_task, TaskError};
