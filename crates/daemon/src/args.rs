// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use clap::builder::ValueHint;
use clap_derive::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct Args {
    #[arg(
        short,
        long,
        value_name = "config",
        help = "Path to configuration (yaml or json) file to use, if any. If not specified, \
                defaults are used. Configuration file values can be overridden by command line \
                arguments.",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "telnet-address",
        help = "Listen address for the line-oriented connections listener"
    )]
    pub telnet_address: Option<String>,

    #[arg(
        long,
        value_name = "telnet-port",
        help = "Listen port for the line-oriented connections listener"
    )]
    pub telnet_port: Option<u16>,

    #[arg(
        short = 'd',
        long,
        value_name = "world-db",
        help = "Path to world database to use or create; omit for an in-memory world",
        value_hint = ValueHint::FilePath
    )]
    pub world_db: Option<PathBuf>,

    #[arg(
        long,
        value_name = "idle-timeout",
        help = "Seconds of inactivity before a connection is closed"
    )]
    pub idle_timeout: Option<u64>,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    pub debug: bool,
}
