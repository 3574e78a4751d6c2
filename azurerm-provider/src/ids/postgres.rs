use super::resource_id;

resource_id! {
    /// ID of a PostgreSQL Flexible Server
    FlexibleServerId, "Flexible Server" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.DBforPostgreSQL/flexibleServers" => flexible_server_name: "Flexible Server Name",
    }
}
