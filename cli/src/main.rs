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

mod loader;

use std::path::PathBuf;

use anyhow::Context;
use orchestra_engine::{Session, SystemDiskInterface};
use orchestra_rule::{Rule, Value};

#[derive(Debug)]
struct Config {
    execution_dir: Option<String>,
    parallelism: usize,
    build_file: String,
    force: bool,
    dryrun: bool,
    verbose: bool,
    quiet: bool,
    debug: bool,
}

fn print_usage() {
    let called_as = std::env::args().next();
    eprintln!(
        r#"usage: {} [options]

options:
  --version       print orchestra's version ("{}")

  -C DIR          change to DIR before doing anything else
  -f FILE         specify the build file [default=build.json]
  -j N            run N jobs in parallel [default={}, derived from CPUs available]

  --force         rebuild everything regardless of staleness
  --dryrun        print what would run without running it
  --verbose       print non-overwriting status lines and rebuild reasons
  --quiet         suppress all status and command output
  --debug         print per-run mtime-call metrics
"#,
        called_as.as_deref().unwrap_or("orchestra"),
        env!("CARGO_PKG_VERSION"),
        num_cpus::get(),
    );
}

fn parse_args() -> anyhow::Result<Config> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print_usage();
        std::process::exit(1);
    }
    if args.contains("--version") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }
    Ok(Config {
        execution_dir: args.opt_value_from_str("-C")?,
        build_file: args
            .opt_value_from_str("-f")?
            .unwrap_or_else(|| "build.json".to_string()),
        parallelism: args.opt_value_from_str("-j")?.unwrap_or_else(num_cpus::get),
        force: args.contains("--force"),
        dryrun: args.contains("--dryrun"),
        verbose: args.contains("--verbose"),
        quiet: args.contains("--quiet"),
        debug: args.contains("--debug"),
    })
}

fn run(config: Config) -> anyhow::Result<i32> {
    if let Some(dir) = &config.execution_dir {
        std::env::set_current_dir(dir).with_context(|| format!("changing to {dir} for -C"))?;
    }
    if config.debug {
        orchestra_metrics::enable();
    }

    let root = std::env::current_dir().context("reading current directory")?;
    let disk = Box::new(SystemDiskInterface);
    let session = Session::new(root, config.parallelism, config.quiet, disk);

    let global = Rule::root();
    global.set("force", Value::Bool(config.force));
    global.set("dryrun", Value::Bool(config.dryrun));
    global.set("verbose", Value::Bool(config.verbose));
    global.set("quiet", Value::Bool(config.quiet));
    global.set("debug", Value::Bool(config.debug));

    let build_file = PathBuf::from(&config.build_file);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building the tokio runtime")?;
    let local = tokio::task::LocalSet::new();

    let handles = local.block_on(&runtime, async {
        loader::load(&session, &global, &build_file)
    })?;

    local.block_on(&runtime, async {
        futures::future::join_all(handles).await;
    });

    if !config.quiet {
        println!("{}", session.summary_line());
    }
    if config.debug {
        orchestra_metrics::dump();
    }

    Ok(session.exit_code())
}

fn main() -> anyhow::Result<()> {
    let config = parse_args()?;
    let code = run(config)?;
    std::process::exit(code);
}
