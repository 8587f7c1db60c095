//! In-memory wallet state. Every mutation is mediated through the journal:
//! public mutators construct a [`JournalEntry`] describing the change and
//! apply it through the same `JournalEntry::apply` path used to replay the
//! journal during block sync, so the two paths can never drift apart.

use std::collections::HashMap;

use rill_core::address::Address;
use rill_core::error::{WalletStateError, WsjError};
use rust_decimal::Decimal;

use crate::journal::entry::JournalEntry;
use crate::wallet::Wallet;

#[derive(Clone, Debug, Default)]
pub struct WalletState {
    wallets: HashMap<Address, Wallet>,
}

impl WalletState {
    pub fn new() -> Self {
        Self { wallets: HashMap::new() }
    }

    pub fn get(&self, addr: &Address) -> Option<&Wallet> {
        self.wallets.get(addr)
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.wallets.contains_key(addr)
    }

    fn require(&self, addr: &Address) -> Result<&Wallet, WsjError> {
        self.wallets
            .get(addr)
            .ok_or_else(|| WsjError::Wallet(WalletStateError::NotFound(addr.to_base58())))
    }

    pub(crate) fn required_signatures_of(&self, addr: &Address) -> Result<u8, WsjError> {
        Ok(self.require(addr)?.required_signatures)
    }

    // --- public mutators: construct the entry, then apply it ---

    pub fn create_wallet(&mut self, wallet: Wallet) -> Result<JournalEntry, WsjError> {
        if self.wallets.contains_key(&wallet.id) {
            return Err(WsjError::Wallet(WalletStateError::AlreadyExists(wallet.id.to_base58())));
        }
        let target = wallet.id.clone();
        // Create's own apply() is a no-op: the wallet must already be
        // present before the entry is built, since WSJ replay only ever
        // calls apply().
        self.wallets.insert(target.clone(), wallet);
        Ok(JournalEntry::Create { target })
    }

    pub fn destroy_wallet(&mut self, target: &Address) -> Result<JournalEntry, WsjError> {
        let snapshot = self.require(target)?.clone();
        let entry = JournalEntry::Destroy { target: target.clone(), snapshot: Box::new(snapshot) };
        entry.apply(self)?;
        Ok(entry)
    }

    pub fn adjust_balance(&mut self, target: &Address, new_balance: Decimal) -> Result<JournalEntry, WsjError> {
        let old_balance = self.require(target)?.balance;
        let entry = JournalEntry::Balance { target: target.clone(), old_balance, new_balance };
        entry.apply(self)?;
        Ok(entry)
    }

    pub fn add_allowed_signer(&mut self, target: &Address, signer: Address) -> Result<JournalEntry, WsjError> {
        let entry = JournalEntry::AllowedSigner {
            target: target.clone(),
            signer,
            adding: true,
            adjust_signers: None,
        };
        entry.apply(self)?;
        Ok(entry)
    }

    pub fn remove_allowed_signer(
        &mut self,
        target: &Address,
        signer: Address,
        adjust_signers: bool,
    ) -> Result<JournalEntry, WsjError> {
        let adjust_signers = if adjust_signers { Some(self.require(target)?.required_signatures) } else { None };
        let entry = JournalEntry::AllowedSigner { target: target.clone(), signer, adding: false, adjust_signers };
        entry.apply(self)?;
        Ok(entry)
    }

    pub fn set_required_signatures(&mut self, target: &Address, new_count: u8) -> Result<JournalEntry, WsjError> {
        let old_count = self.require(target)?.required_signatures;
        let entry = JournalEntry::RequiredSignatures { target: target.clone(), old_count, new_count };
        entry.apply(self)?;
        Ok(entry)
    }

    pub fn set_pubkey(&mut self, target: &Address, pubkey: Vec<u8>) -> Result<JournalEntry, WsjError> {
        let entry = JournalEntry::Pubkey { target: target.clone(), pubkey };
        entry.apply(self)?;
        Ok(entry)
    }

    pub fn set_user_data(&mut self, target: &Address, new_data: Option<Vec<u8>>) -> Result<JournalEntry, WsjError> {
        let old_data = self.require(target)?.user_data.clone();
        let entry = JournalEntry::Data { target: target.clone(), old_data, new_data };
        entry.apply(self)?;
        Ok(entry)
    }

    // --- internal mutators: invoked only from JournalEntry::apply/revert ---

    pub(crate) fn set_balance_internal(&mut self, target: &Address, balance: Decimal) -> Result<(), WsjError> {
        let wallet = self
            .wallets
            .get_mut(target)
            .ok_or_else(|| WsjError::Wallet(WalletStateError::NotFound(target.to_base58())))?;
        wallet.balance = balance;
        Ok(())
    }

    pub(crate) fn add_allowed_signer_internal(
        &mut self,
        target: &Address,
        signer: Address,
        adding: bool,
        revert: bool,
    ) -> Result<(), WsjError> {
        let wallet = self
            .wallets
            .get_mut(target)
            .ok_or_else(|| WsjError::Wallet(WalletStateError::NotFound(target.to_base58())))?;
        // `revert` flips the forward direction: an add reverts to a remove
        // and vice versa.
        let add_effective = adding != revert;
        if add_effective {
            wallet.allowed_signers.insert(signer);
        } else {
            wallet.allowed_signers.remove(&signer);
        }
        wallet.check_invariants().map_err(WsjError::Wallet)?;
        Ok(())
    }

    pub(crate) fn set_required_signatures_internal(&mut self, target: &Address, count: u8) -> Result<(), WsjError> {
        let wallet = self
            .wallets
            .get_mut(target)
            .ok_or_else(|| WsjError::Wallet(WalletStateError::NotFound(target.to_base58())))?;
        wallet.required_signatures = count;
        wallet.check_invariants().map_err(WsjError::Wallet)?;
        Ok(())
    }

    pub(crate) fn set_pubkey_internal(
        &mut self,
        target: &Address,
        pubkey: Option<Vec<u8>>,
        _revert: bool,
    ) -> Result<(), WsjError> {
        let wallet = self
            .wallets
            .get_mut(target)
            .ok_or_else(|| WsjError::Wallet(WalletStateError::NotFound(target.to_base58())))?;
        wallet.public_key = pubkey;
        Ok(())
    }

    pub(crate) fn set_user_data_internal(
        &mut self,
        target: &Address,
        new_value: Option<Vec<u8>>,
        expected_current: Option<Vec<u8>>,
    ) -> Result<(), WsjError> {
        let wallet = self
            .wallets
            .get_mut(target)
            .ok_or_else(|| WsjError::Wallet(WalletStateError::NotFound(target.to_base58())))?;
        if wallet.user_data != expected_current {
            return Err(WsjError::DivergentState {
                expected: format!("{expected_current:?}"),
                actual: format!("{:?}", wallet.user_data),
            });
        }
        wallet.user_data = new_value;
        Ok(())
    }

    pub(crate) fn remove_wallet_internal(&mut self, target: &Address) -> Result<(), WsjError> {
        self.wallets
            .remove(target)
            .ok_or_else(|| WsjError::Wallet(WalletStateError::NotFound(target.to_base58())))?;
        Ok(())
    }

    pub(crate) fn set_wallet_internal(&mut self, target: &Address, wallet: Wallet) -> Result<(), WsjError> {
        debug_assert_eq!(target, &wallet.id);
        self.wallets.insert(target.clone(), wallet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new(vec![byte; 4]).unwrap()
    }

    #[test]
    fn create_wallet_then_get() {
        let mut state = WalletState::new();
        state.create_wallet(Wallet::new(addr(1))).unwrap();
        assert!(state.contains(&addr(1)));
    }

    #[test]
    fn create_wallet_twice_fails() {
        let mut state = WalletState::new();
        state.create_wallet(Wallet::new(addr(1))).unwrap();
        let err = state.create_wallet(Wallet::new(addr(1))).unwrap_err();
        assert!(matches!(err, WsjError::Wallet(WalletStateError::AlreadyExists(_))));
    }

    #[test]
    fn adjust_balance_on_missing_wallet_fails() {
        let mut state = WalletState::new();
        let err = state.adjust_balance(&addr(1), Decimal::ONE).unwrap_err();
        assert!(matches!(err, WsjError::Wallet(WalletStateError::NotFound(_))));
    }

    #[test]
    fn adjust_balance_updates_state() {
        let mut state = WalletState::new();
        state.create_wallet(Wallet::new(addr(1))).unwrap();
        state.adjust_balance(&addr(1), Decimal::from_str("7.5").unwrap()).unwrap();
        assert_eq!(state.get(&addr(1)).unwrap().balance, Decimal::from_str("7.5").unwrap());
    }

    #[test]
    fn add_then_remove_allowed_signer() {
        let mut state = WalletState::new();
        state.create_wallet(Wallet::new(addr(1))).unwrap();
        state.add_allowed_signer(&addr(1), addr(2)).unwrap();
        assert!(state.get(&addr(1)).unwrap().allowed_signers.contains(&addr(2)));
        state.remove_allowed_signer(&addr(1), addr(2), false).unwrap();
        assert!(!state.get(&addr(1)).unwrap().allowed_signers.contains(&addr(2)));
    }

    #[test]
    fn remove_signer_with_adjust_decrements_required_signatures_floored_at_one() {
        let mut state = WalletState::new();
        let mut wallet = Wallet::new(addr(1));
        wallet.allowed_signers.insert(addr(2));
        wallet.required_signatures = 1;
        state.create_wallet(wallet).unwrap();

        state.remove_allowed_signer(&addr(1), addr(2), true).unwrap();
        assert_eq!(state.get(&addr(1)).unwrap().required_signatures, 1);
    }

    #[test]
    fn destroy_then_create_again_restores_independent_wallet() {
        let mut state = WalletState::new();
        state.create_wallet(Wallet::new(addr(1))).unwrap();
        state.adjust_balance(&addr(1), Decimal::from_str("10").unwrap()).unwrap();
        state.destroy_wallet(&addr(1)).unwrap();
        assert!(!state.contains(&addr(1)));
    }

    #[test]
    fn set_user_data_then_clear() {
        let mut state = WalletState::new();
        state.create_wallet(Wallet::new(addr(1))).unwrap();
        state.set_user_data(&addr(1), Some(b"hi".to_vec())).unwrap();
        assert_eq!(state.get(&addr(1)).unwrap().user_data, Some(b"hi".to_vec()));
        state.set_user_data(&addr(1), None).unwrap();
        assert_eq!(state.get(&addr(1)).unwrap().user_data, None);
    }

    #[test]
    fn set_required_signatures_rejects_invariant_violation() {
        let mut state = WalletState::new();
        state.create_wallet(Wallet::new(addr(1))).unwrap();
        let err = state.set_required_signatures(&addr(1), 5).unwrap_err();
        assert!(matches!(err, WsjError::Wallet(WalletStateError::RequiredSignaturesTooHigh { .. })));
    }
}
