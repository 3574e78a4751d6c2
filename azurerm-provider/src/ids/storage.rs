use super::resource_id;

resource_id! {
    /// ID of a Storage Account
    StorageAccountId, "Storage Account" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Storage/storageAccounts" => storage_account_name: "Storage Account Name",
    }
}
