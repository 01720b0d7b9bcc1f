mod service;

use tally_keypair::Keypair;
use tally_resource::Resource;
use tally_transaction::{Transaction, TransactionBuilder};

/// Issues `quantity` of `label` to `owner`, returning the minted resource.
fn mint(owner: &Keypair, label: &str, quantity: u64) -> (Transaction, Resource) {
    let resource = Resource::new(owner.public_key(), label, quantity);
    let tx = TransactionBuilder::new().create(resource.clone()).build();
    (tx, resource)
}

/// Moves all of `input` from `from` to `to`.
fn transfer(from: &Keypair, input: &Resource, to: &Keypair) -> (Transaction, Resource) {
    let output = Resource::new(to.public_key(), input.label(), input.quantity());
    let tx = TransactionBuilder::new()
        .consume(input.clone(), from.secret_key())
        .create(output.clone())
        .build();
    (tx, output)
}
