mod glare_steps;
mod handshake_steps;
mod lifecycle_steps;
mod signal_steps;
