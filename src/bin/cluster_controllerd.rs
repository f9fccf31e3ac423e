// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use cluster_controller::error::ErrorKind;
use cluster_controller::server;

fn main() {
    let exit_code = match server::run::run_server() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("cluster-controllerd: {err}");
            match err.kind() {
                ErrorKind::ConfigError => 1,
                _ => 2,
            }
        }
    };
    std::process::exit(exit_code);
}
