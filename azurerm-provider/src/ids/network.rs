use super::resource_id;

resource_id! {
    /// ID of a Virtual Network
    VirtualNetworkId, "Virtual Network" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Network/virtualNetworks" => virtual_network_name: "Virtual Network Name",
    }
}

resource_id! {
    /// ID of a Subnet within a Virtual Network
    SubnetId, "Subnet" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Network/virtualNetworks" => virtual_network_name: "Virtual Network Name",
        "subnets" => subnet_name: "Subnet Name",
    }
}

impl SubnetId {
    /// ID of the Virtual Network containing this Subnet
    pub fn virtual_network_id(&self) -> VirtualNetworkId {
        VirtualNetworkId::new(
            self.subscription_id.clone(),
            self.resource_group_name.clone(),
            self.virtual_network_name.clone(),
        )
    }
}
