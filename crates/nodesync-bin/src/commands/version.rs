// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `version` command.

use crate::error::BinResult;

/// Prints version and build information.
pub fn version() -> BinResult<()> {
    println!("{} {}", crate::NAME, crate::VERSION);
    println!();
    println!("Build:");
    println!("  Target: {}-{}", std::env::consts::ARCH, std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");
    Ok(())
}
