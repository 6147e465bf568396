/// Data layer: typed arrays, the hierarchical store, and persistence.
///
/// Architecture:
/// ```text
///   DataContainerArray                      .json / .csv / .parquet
///        │                                          ▲
///        ▼                                          │
///   ┌───────────────┐                        ┌──────────┐
///   │ DataContainer │                        │  loader  │  store ⇄ files
///   └───────────────┘                        └──────────┘
///        │
///        ▼
///   ┌─────────────────┐
///   │ AttributeMatrix │  tuple dims, name → Arc<DataArray>
///   └─────────────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ DataArray │  ScalarType-tagged storage, N components per tuple
///   └───────────┘
/// ```

pub mod init;
pub mod loader;
pub mod model;
pub mod store;
