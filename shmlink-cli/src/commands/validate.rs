// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmlink validate` command - Show the validated configuration.

use shmlink_core::{Config, ShmLinkResult};

pub fn execute(config: &Config) -> ShmLinkResult<()> {
    let segment = &config.segment;

    println!("✓ Configuration is valid");
    println!();
    println!("Segment Settings:");
    println!("  Name:        {}", segment.name);
    println!("  Key Path:    {}", segment.key_path.display());
    println!("  Project ID:  {}", segment.project_id);
    println!("  Size:        {} bytes", segment.size);
    println!("  Identifier:  {}", segment.identifier());

    Ok(())
}
