// ─── WOWID3 Core ───
// Backend for the WOWID3 modpack launcher. The desktop shell embeds this
// crate and renders what it reports.
//
// Architecture:
//   core/
//     registry/   — session-wide store of active, user-visible errors
//     events/     — broadcast bus for progress, logs and state changes
//     auth/       — Microsoft device-code sign-in + profile persistence
//     version/    — Mojang manifest + per-version metadata
//     modpack/    — release manifests from the release server
//     install/    — staged game install (client, libraries, modpack)
//     downloader/ — concurrent downloads with SHA-1/SHA-256 validation
//     java/       — cached Java runtime from the release server
//     launch/     — argument assembly, spawn, monitoring, crash triage
//     net/        — game server reachability probes
//     state/      — session object tying everything together

pub mod auth;
pub mod downloader;
pub mod error;
pub mod events;
pub mod http;
pub mod install;
pub mod java;
pub mod launch;
pub mod modpack;
pub mod net;
pub mod registry;
pub mod state;
pub mod version;
