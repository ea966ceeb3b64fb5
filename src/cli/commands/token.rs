use clap::{Arg, Command};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL_HOURS: &str = "token-ttl-hours";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("Secret used to sign access tokens (HS256)")
                .env("ACCOUNTD_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_HOURS)
                .long(ARG_TOKEN_TTL_HOURS)
                .help("Access token validity in hours")
                .env("ACCOUNTD_TOKEN_TTL_HOURS")
                .default_value("72")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
