mod test_instance;
