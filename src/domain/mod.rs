// 領域層：盤面模型、庫存、配置解析與轉移解析；除 `ports` 外皆為同步、無 I/O

pub mod allocation;
pub mod catalog;
pub mod inventory;
pub mod layout;
pub mod model;
pub mod plan;
pub mod plate;
pub mod ports;
pub mod resolver;
