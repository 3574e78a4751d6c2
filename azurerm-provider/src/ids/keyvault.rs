use super::resource_id;

resource_id! {
    /// ID of a Key Vault
    KeyVaultId, "Key Vault" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.KeyVault/vaults" => vault_name: "Vault Name",
    }
}

resource_id! {
    /// ID of a soft-deleted Key Vault awaiting purge or recovery
    DeletedVaultId, "Deleted Vault" {
        "subscriptions" => subscription_id: "Subscription",
        "providers/Microsoft.KeyVault/locations" => location: "Location",
        "deletedVaults" => vault_name: "Deleted Vault Name",
    }
}
