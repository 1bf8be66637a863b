// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "gneiss", about = "Switch-side management plane daemon")]
pub struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Print the version and exit.
    #[arg(long, default_value_t = false)]
    version: bool,

    /// Warm-boot initialization: reattach to running hardware state.
    #[arg(long, default_value_t = false)]
    warmboot: bool,
}

impl Args {
    pub fn config(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn version(&self) -> bool {
        self.version
    }

    pub fn warmboot(&self) -> bool {
        self.warmboot
    }
}
