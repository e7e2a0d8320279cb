use similar_asserts::assert_eq;

use invoicr::batch;

#[test]
fn a_generated_batch_survives_the_fixture_round_trip() {
    let fixture_directory = tempfile::tempdir().unwrap();
    // No names.csv in an empty directory, so the built-in pool is used
    let customer_names = batch::load_customer_names(fixture_directory.path()).unwrap();
    let invoices = batch::generate_invoices(5, 10, &customer_names).unwrap();

    let fixture_name = batch::fixture_file_name(invoices.len()).unwrap();
    assert!(fixture_name.starts_with("5_invoices_"));
    let fixture_path = fixture_directory.path().join(fixture_name);

    batch::save_invoices(&invoices, &fixture_path).unwrap();
    let loaded_invoices = batch::load_invoices(&fixture_path).unwrap();
    assert_eq!(invoices, loaded_invoices);
}

#[test]
fn a_csv_name_pool_is_consumed_without_replacement() {
    let data_directory = tempfile::tempdir().unwrap();
    std::fs::write(
        data_directory.path().join("names.csv"),
        "Ada,Lovelace\nGrace,Hopper\nAlan,Turing\n",
    )
    .unwrap();

    let customer_names = batch::load_customer_names(data_directory.path()).unwrap();
    assert_eq!(customer_names.len(), 3);

    let invoices = batch::generate_invoices(3, 7, &customer_names).unwrap();
    let mut sampled_names: Vec<&str> = invoices
        .iter()
        .map(|invoice| invoice.name.as_str())
        .collect();
    sampled_names.sort_unstable();
    assert_eq!(sampled_names, vec!["Ada Lovelace", "Alan Turing", "Grace Hopper"]);
}
