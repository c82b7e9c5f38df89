use std::{cell::RefCell, rc::Rc};

use tracing::info;

use super::{
    AuthProvider, Identity, Subscription,
    subscription::{Watchers, subscribe},
};

#[derive(Debug, Default)]
struct AuthState {
    user: Option<Identity>,
    watchers: Watchers<(), Option<Identity>>,
}

fn watchers(state: &mut AuthState) -> &mut Watchers<(), Option<Identity>> {
    &mut state.watchers
}

/// An [AuthProvider] whose identity is set by hand: a fixed local profile, or tests
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    inner: Rc<RefCell<AuthState>>,
}

impl StaticAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        let auth = Self::new();
        auth.inner.borrow_mut().user = Some(identity);
        auth
    }

    pub fn sign_in(&self, identity: Identity) {
        info!(uid = %identity.uid, "signed in");
        self.publish(Some(identity));
    }

    pub fn sign_out(&self) {
        info!("signed out");
        self.publish(None);
    }

    fn publish(&self, user: Option<Identity>) {
        let mut state = self.inner.borrow_mut();
        state.user = user.clone();
        state.watchers.notify(|_| true, |_| user.clone());
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<Identity> {
        self.inner.borrow().user.clone()
    }

    fn subscribe(&self) -> Subscription<Option<Identity>> {
        let current = self.current_user();
        subscribe(&self.inner, (), Some(current), watchers)
    }
}
