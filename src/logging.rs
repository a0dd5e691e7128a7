// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Maps a `-v` count to the default filter applied when `RUST_LOG` is unset.
pub fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "ringdine=warn",
        1 => "ringdine=info",
        2 => "ringdine=debug",
        _ => "ringdine=trace",
    }
}

/// Initialize the logger with the specified verbosity level
///
/// # Arguments
/// * `verbose` - Verbosity level (0=warn, 1=info, 2=debug, 3+=trace)
///
/// Log records go to stderr so they never interleave with the actor trace on stdout.
pub fn setup_logger(verbose: u8) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter(verbose)),
    )
    .format_timestamp_millis()
    .format_module_path(false)
    .format_target(false)
    .target(env_logger::Target::Stderr)
    .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels_map_to_filters() {
        assert_eq!(default_filter(0), "ringdine=warn");
        assert_eq!(default_filter(1), "ringdine=info");
        assert_eq!(default_filter(2), "ringdine=debug");
        assert_eq!(default_filter(7), "ringdine=trace");
    }
}
