//! Deterministic mapping from `(hub_type_name, address)` to broker channel
//! strings. Every channel carries a `{hub_type_name}:` prefix so that
//! multiple hub types can share one broker without collision.

/// The five broker channels a lifetime manager subscribes/publishes to,
/// plus the per-server ack channel.
pub enum Address<'a> {
    All,
    Connection(&'a str),
    User(&'a str),
    Group(&'a str),
    GroupManagement,
    Ack(&'a str),
}

/// Formats the broker channel string for `address` under `hub_type_name`.
///
/// IDs and names are used verbatim -- they are never escaped, since the
/// broker compares the whole channel string and a `:` inside a user or
/// group name does not introduce ambiguity.
pub fn channel_name(hub_type_name: &str, address: Address<'_>) -> String {
    match address {
        Address::All => format!("{hub_type_name}:all"),
        Address::Connection(id) => format!("{hub_type_name}:c:{id}"),
        Address::User(id) => format!("{hub_type_name}:u:{id}"),
        Address::Group(name) => format!("{hub_type_name}:g:{name}"),
        Address::GroupManagement => format!("{hub_type_name}:gm"),
        Address::Ack(server_name) => format!("{hub_type_name}:ack:{server_name}"),
    }
}
