use {super::money::Money, serde::Serialize, uuid::Uuid};

#[derive(Debug, Clone, Serialize)]
pub struct PackageItem {
    pub service_id: Uuid,
    pub sessions: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Package {
    pub id: Uuid,
    pub name: String,
    pub price: Money,
    pub validity_days: i32,
    pub active: bool,
    pub items: Vec<PackageItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub price: Money,
    pub validity_days: i32,
    pub active: bool,
}

/// A resolved purchase target.
#[derive(Debug, Clone)]
pub enum CatalogItem {
    Package(Package),
    Service(Service),
}

impl CatalogItem {
    pub fn name(&self) -> &str {
        match self {
            Self::Package(p) => &p.name,
            Self::Service(s) => &s.name,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Self::Package(p) => p.active,
            Self::Service(s) => s.active,
        }
    }
}
