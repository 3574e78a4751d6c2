use super::resource_id;

resource_id! {
    /// ID of a Subscription Alias (tenant scoped, no subscription segment)
    SubscriptionAliasId, "Subscription Alias" {
        "providers/Microsoft.Subscription/aliases" => alias_name: "Alias Name",
    }
}
