use crate::models::Role;

/// Access class of a client route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRequirement {
    Public,
    AdminOnly,
    UserOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectToLogin,
    RedirectToHome,
    RedirectToAdmin,
}

/// Pure navigation guard. Admins are sent to their own area instead of the
/// participant pages; coordinators browse as participants.
pub fn check_route(is_authenticated: bool, role: Option<Role>, requirement: RouteRequirement) -> RouteDecision {
    match requirement {
        RouteRequirement::Public => RouteDecision::Allow,
        _ if !is_authenticated => RouteDecision::RedirectToLogin,
        RouteRequirement::AdminOnly => match role {
            Some(Role::Admin) => RouteDecision::Allow,
            _ => RouteDecision::RedirectToHome,
        },
        RouteRequirement::UserOnly => match role {
            Some(Role::Admin) => RouteDecision::RedirectToAdmin,
            _ => RouteDecision::Allow,
        },
    }
}
