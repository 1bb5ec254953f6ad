pub mod book;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payment_gateway;
pub mod payment_transaction;
pub mod shipping_method;
pub mod user_address;

pub use book::Entity as Book;
pub use cart_item::Entity as CartItem;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use payment_gateway::Entity as PaymentGateway;
pub use payment_transaction::Entity as PaymentTransaction;
pub use shipping_method::Entity as ShippingMethod;
pub use user_address::Entity as UserAddress;

pub type BookModel = book::Model;
pub type CartItemModel = cart_item::Model;
pub type OrderModel = order::Model;
pub type OrderItemModel = order_item::Model;
pub type PaymentGatewayModel = payment_gateway::Model;
pub type PaymentTransactionModel = payment_transaction::Model;
pub type ShippingMethodModel = shipping_method::Model;
pub type UserAddressModel = user_address::Model;
