//! Built-in route table for the storefront API.
//!
//! Used whenever the configuration does not list routes of its own.

use crate::config::schema::{AuthMode, GatewayConfig, RouteConfig};

/// Backend name reserved for routes the gateway answers itself.
pub const LOCAL_BACKEND: &str = "local";

const ADMIN: &str = "admin";

#[derive(Clone, Copy)]
enum Access {
    Public,
    User,
    Admin,
}

struct Builtin {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    access: Access,
    backend: &'static str,
    operation: &'static str,
    status: u16,
    subject: Option<&'static str>,
}

fn route(
    name: &'static str,
    method: &'static str,
    path: &'static str,
    access: Access,
    backend: &'static str,
    operation: &'static str,
) -> Builtin {
    Builtin {
        name,
        method,
        path,
        access,
        backend,
        operation,
        status: 200,
        subject: None,
    }
}

impl Builtin {
    fn created(mut self) -> Self {
        self.status = 201;
        self
    }

    fn subject(mut self, field: &'static str) -> Self {
        self.subject = Some(field);
        self
    }
}

const USER: &str = "/user.v1.UserService/";
const PRODUCT: &str = "/product.v1.ProductService/";
const CART: &str = "/cart.v1.CartService/";
const ORDER: &str = "/order.v1.OrderService/";

fn builtins() -> Vec<Builtin> {
    use Access::*;
    vec![
        route("health", "GET", "/health", Public, LOCAL_BACKEND, ""),
        route("health-v1", "GET", "/api/v1/health", Public, LOCAL_BACKEND, ""),
        // Users
        route("user-register", "POST", "/api/v1/users/register", Public, "user", "CreateUser").created(),
        route("user-login", "POST", "/api/v1/users/login", Public, "user", "Login"),
        route("user-profile", "GET", "/api/v1/users/profile", User, "user", "GetUserByID").subject("id"),
        route("user-update", "PUT", "/api/v1/users/update", User, "user", "UpdateUser").subject("id"),
        route("user-search", "GET", "/api/v1/users/search", Admin, "user", "SearchUsers"),
        route("user-by-id", "GET", "/api/v1/users/by-id", Admin, "user", "GetUserByID"),
        route("user-delete", "DELETE", "/api/v1/users/delete", Admin, "user", "DeleteUser"),
        // Addresses
        route("address-create", "POST", "/api/v1/addresses/create", User, "user", "CreateAddress")
            .created()
            .subject("user_id"),
        route("address-list", "GET", "/api/v1/addresses/list", User, "user", "ListAddressesByUserID")
            .subject("user_id"),
        route("address-update", "PUT", "/api/v1/addresses/update", User, "user", "UpdateAddress")
            .subject("user_id"),
        route("address-delete", "DELETE", "/api/v1/addresses/delete", User, "user", "DeleteAddress")
            .subject("user_id"),
        // Products
        route("product-list", "GET", "/api/v1/products", Public, "product", "ListProducts"),
        route("product-by-id", "GET", "/api/v1/products/by-id", Public, "product", "GetProductByID"),
        route("product-create", "POST", "/api/v1/products/create", Admin, "product", "CreateProduct").created(),
        route("product-update", "PUT", "/api/v1/products/update", Admin, "product", "UpdateProduct"),
        route("product-delete", "DELETE", "/api/v1/products/delete", Admin, "product", "DeleteProduct"),
        // Categories
        route("category-list", "GET", "/api/v1/categories", Public, "product", "ListCategories"),
        route("category-by-id", "GET", "/api/v1/categories/by-id", Public, "product", "GetCategoryByID"),
        route("category-create", "POST", "/api/v1/categories/create", Admin, "product", "CreateCategory").created(),
        route("category-update", "PUT", "/api/v1/categories/update", Admin, "product", "UpdateCategory"),
        route("category-delete", "DELETE", "/api/v1/categories/delete", Admin, "product", "DeleteCategory"),
        // Cart
        route("cart-get", "GET", "/api/v1/cart", User, "cart", "GetCart").subject("user_id"),
        route("cart-add", "POST", "/api/v1/cart/items/add", User, "cart", "AddItem").subject("user_id"),
        route("cart-update", "PUT", "/api/v1/cart/items/update", User, "cart", "UpdateItem").subject("user_id"),
        route("cart-remove", "DELETE", "/api/v1/cart/items/remove", User, "cart", "RemoveItem").subject("user_id"),
        route("cart-clear", "DELETE", "/api/v1/cart/clear", User, "cart", "ClearCart").subject("user_id"),
        // Orders
        route("order-create", "POST", "/api/v1/orders/create", User, "order", "CreateOrder")
            .created()
            .subject("user_id"),
        route("order-list", "GET", "/api/v1/orders", User, "order", "ListOrders"),
        route("order-by-id", "GET", "/api/v1/orders/by-id", User, "order", "GetOrderByID"),
        route("order-item-add", "POST", "/api/v1/orders/items/add", User, "order", "AddOrderItem"),
        route("order-item-remove", "DELETE", "/api/v1/orders/items/remove", User, "order", "RemoveOrderItem"),
        route("order-status", "PATCH", "/api/v1/orders/status", Admin, "order", "UpdateOrderStatus"),
    ]
}

fn service_prefix(backend: &str) -> &'static str {
    match backend {
        "user" => USER,
        "product" => PRODUCT,
        "cart" => CART,
        _ => ORDER,
    }
}

/// The storefront routes, as configuration entries.
pub fn builtin_routes() -> Vec<RouteConfig> {
    builtins()
        .into_iter()
        .map(|builtin| {
            let (auth, roles) = match builtin.access {
                Access::Public => (AuthMode::Public, Vec::new()),
                Access::User => (AuthMode::Authenticated, Vec::new()),
                Access::Admin => (AuthMode::Authenticated, vec![ADMIN.to_string()]),
            };
            let operation = if builtin.backend == LOCAL_BACKEND {
                String::new()
            } else {
                format!("{}{}", service_prefix(builtin.backend), builtin.operation)
            };
            RouteConfig {
                name: builtin.name.to_string(),
                method: builtin.method.to_string(),
                path: builtin.path.to_string(),
                auth,
                roles,
                backend: builtin.backend.to_string(),
                operation,
                success_status: builtin.status,
                bind_subject: builtin.subject.map(str::to_string),
            }
        })
        .collect()
}

/// Configured routes, or the built-in table when none are configured.
pub fn effective_routes(config: &GatewayConfig) -> Vec<RouteConfig> {
    if config.routes.is_empty() {
        builtin_routes()
    } else {
        config.routes.clone()
    }
}
