use super::resource_id;

resource_id! {
    /// ID of a Subscription
    SubscriptionId, "Subscription" {
        "subscriptions" => subscription_id: "Subscription",
    }
}

resource_id! {
    /// ID of a Resource Group
    ResourceGroupId, "Resource Group" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
    }
}
