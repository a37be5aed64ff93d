// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `nodesync` entry point.

use nodesync_bin::error::report_error_and_exit;
use nodesync_bin::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    if let Err(error) = nodesync_bin::run(cli).await {
        report_error_and_exit(error);
    }
}
